use actix_web::web;

pub mod admin;
pub mod auth;
pub mod readings;

pub fn config(cfg: &mut web::ServiceConfig) {
    // Auth routes (public)
    cfg.service(web::scope("/api/auth").service(auth::login));

    // Chamber routes: device ingestion is public, everything else needs a token
    cfg.service(
        web::scope("/api/chambers")
            .app_data(readings::query_config())
            .service(readings::list_chambers)
            .service(readings::ingest_reading)
            .service(readings::ingest_info)
            .service(readings::range_rows)
            .service(readings::chart_data)
            .service(readings::download_csv)
            .service(readings::download_pdf),
    );

    // User administration (superuser only)
    cfg.service(
        web::scope("/api/admin/users")
            .service(admin::list_users)
            .service(admin::create_user)
            .service(admin::update_chambers)
            .service(admin::delete_user),
    );
}

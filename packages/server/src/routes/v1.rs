use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest("/reports", report_routes())
}

fn report_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::report::list_reports))
        .routes(routes!(handlers::report::ingest_report))
        .routes(routes!(
            handlers::report::get_report,
            handlers::report::delete_report
        ))
        .routes(routes!(handlers::report::get_ingest_status))
        .routes(routes!(handlers::report::list_fight_events))
}

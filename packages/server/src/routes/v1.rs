use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers::{
    archive, auth, calendar, competition, compo, entry, event, programme, screenshow, store,
    upload, vote, vote_rights,
};
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/auth", auth_routes())
        .nest("/events", event_routes())
        .nest("/vote-code-requests", vote_code_request_routes())
        .nest("/compos", compo_routes(config))
        .nest("/entries", entry_routes())
        .nest("/competitions", competition_routes())
        .nest("/store", store_routes())
        .nest("/uploads", upload_routes(config))
        .nest("/programme", programme_routes())
        .nest("/calendar", calendar_routes())
        .nest("/screenshow", screenshow_routes())
        .nest("/archive", archive_routes())
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(auth::register))
        .routes(routes!(auth::login))
        .routes(routes!(auth::me))
        .routes(routes!(auth::set_user_role))
}

fn event_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(event::list_events, event::create_event))
        .routes(routes!(
            event::get_event,
            event::update_event,
            event::delete_event
        ))
        .routes(routes!(calendar::event_calendar_ics))
        .routes(routes!(vote_rights::claim_ticket_vote_code))
        .routes(routes!(vote_rights::get_my_vote_code))
        .routes(routes!(
            vote_rights::create_vote_code_request,
            vote_rights::list_vote_code_requests
        ))
        .routes(routes!(
            vote_rights::get_my_vote_code_request,
            vote_rights::update_my_vote_code_request
        ))
}

fn vote_code_request_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(vote_rights::set_vote_code_request_status))
}

fn compo_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let submissions = OpenApiRouter::new()
        .routes(routes!(entry::create_entry, entry::list_compo_entries))
        .layer(entry::entry_body_limit(&config.storage));

    OpenApiRouter::new()
        .routes(routes!(compo::list_compos, compo::create_compo))
        .routes(routes!(
            compo::get_compo,
            compo::update_compo,
            compo::delete_compo
        ))
        .routes(routes!(entry::compo_results))
        .routes(routes!(vote::submit_votes))
        .routes(routes!(vote::get_my_votes))
        .routes(routes!(vote::list_vote_groups))
        .merge(submissions)
}

fn entry_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(entry::list_my_entries))
        .routes(routes!(
            entry::get_entry,
            entry::update_entry,
            entry::delete_entry
        ))
        .routes(routes!(entry::download_entry_file))
        .routes(routes!(entry::disqualify_entry))
        .routes(routes!(entry::requalify_entry))
        .routes(routes!(entry::set_archive_fields))
}

fn competition_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            competition::list_competitions,
            competition::create_competition
        ))
        .routes(routes!(
            competition::get_competition,
            competition::update_competition,
            competition::delete_competition
        ))
        .routes(routes!(
            competition::join_competition,
            competition::leave_competition
        ))
        .routes(routes!(competition::list_participations))
        .routes(routes!(competition::set_participation_result))
        .routes(routes!(competition::competition_results))
}

fn store_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(store::list_store_items, store::create_store_item))
        .routes(routes!(store::update_store_item, store::delete_store_item))
        .routes(routes!(store::add_variant))
        .routes(routes!(store::delete_variant))
        .routes(routes!(store::create_transaction))
        .routes(routes!(store::get_transaction))
        .routes(routes!(store::list_transactions))
        .routes(routes!(store::mark_transaction_paid))
        .routes(routes!(store::cancel_transaction))
        .routes(routes!(store::deliver_item))
}

fn upload_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let files = OpenApiRouter::new()
        .routes(routes!(upload::upload_file, upload::list_uploads))
        .layer(upload::upload_body_limit(&config.storage));

    OpenApiRouter::new()
        .routes(routes!(upload::update_upload, upload::delete_upload))
        .routes(routes!(upload::download_upload))
        .merge(files)
}

fn programme_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            programme::list_programme,
            programme::create_programme_event
        ))
        .routes(routes!(
            programme::update_programme_event,
            programme::delete_programme_event
        ))
}

fn calendar_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            calendar::list_calendar_events,
            calendar::create_calendar_event
        ))
        .routes(routes!(
            calendar::update_calendar_event,
            calendar::delete_calendar_event
        ))
}

fn screenshow_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(screenshow::list_messages, screenshow::create_message))
        .routes(routes!(screenshow::active_messages))
        .routes(routes!(screenshow::update_message, screenshow::delete_message))
        .routes(routes!(screenshow::list_sponsors, screenshow::create_sponsor))
        .routes(routes!(screenshow::update_sponsor, screenshow::delete_sponsor))
}

fn archive_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(archive::list_archived_events))
        .routes(routes!(archive::archive_event_detail))
        .routes(routes!(archive::finalize_archive))
        .routes(routes!(archive::unarchive_event))
        .routes(routes!(
            archive::list_video_categories,
            archive::create_video_category
        ))
        .routes(routes!(
            archive::update_video_category,
            archive::delete_video_category
        ))
        .routes(routes!(archive::create_video))
        .routes(routes!(archive::update_video, archive::delete_video))
}

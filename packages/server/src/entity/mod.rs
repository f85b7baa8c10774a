pub mod blob_object;
pub mod blob_ref;
pub mod calendar_event;
pub mod competition;
pub mod competition_participation;
pub mod compo;
pub mod entry;
pub mod event;
pub mod other_video;
pub mod other_video_category;
pub mod programme_event;
pub mod role;
pub mod role_permission;
pub mod screen_message;
pub mod sponsor;
pub mod store_item;
pub mod store_item_variant;
pub mod store_transaction;
pub mod ticket_vote_code;
pub mod transaction_item;
pub mod uploaded_file;
pub mod user;
pub mod vote;
pub mod vote_code_request;
pub mod vote_group;

mod common;

mod archive;
mod auth;
mod competition;
mod compo_entry;
mod programme;
mod store;
mod upload;
mod voting;

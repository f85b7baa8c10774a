pub mod archive;
pub mod auth;
pub mod calendar;
pub mod competition;
pub mod compo;
pub mod entry;
pub mod event;
pub mod programme;
pub mod screenshow;
pub mod shared;
pub mod store;
pub mod upload;
pub mod vote;
pub mod vote_rights;

pub mod accounts;
pub mod groups;
pub mod invites;
pub mod movies;
pub mod profile;
pub mod providers;
pub mod watchlist;

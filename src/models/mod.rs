pub mod group;
pub mod invite;
pub mod movie;
pub mod movie_list;
pub mod user;
pub mod vote;

pub use group::{Group, GroupMember, LeaveOutcome, Role, SortPreference};
pub use invite::{Invite, InviteStatus};
pub use movie::{
    CriticRating, ImdbId, MovieMetadata, MovieSummary, OmdbMovieDetails, OmdbSearchResponse,
};
pub use movie_list::{MovieList, MovieListEntry};
pub use user::{Theme, User};
pub use vote::{Rating, Stars, Vote, VoteValue};

mod challenge_store;
mod postgres;
mod sqlite;

pub use challenge_store::ChallengeStore;

pub mod admin;
pub mod athletes;
pub mod leaderboard;
pub mod scores;

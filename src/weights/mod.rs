pub mod allocator;
pub mod leaderboard;
pub mod policy;
pub mod rebalancer;

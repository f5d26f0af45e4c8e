// Export all route modules
pub mod analytics;
pub mod notes;
pub mod startups;
pub mod watchlist;

// Re-export all route handlers for easy importing
pub use analytics::*;
pub use notes::*;
pub use startups::*;
pub use watchlist::*;

pub mod note;
pub mod startup;
pub mod user;
pub mod watchlist_item;

pub use startup::Stage;

pub use note::Entity as Note;
pub use startup::Entity as Startup;
pub use user::Entity as User;
pub use watchlist_item::Entity as WatchlistItem;

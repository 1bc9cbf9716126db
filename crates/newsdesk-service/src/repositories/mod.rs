pub mod categories;
pub mod favorites;
pub mod stories;
pub mod traits;

pub use categories::SqliteCategoriesRepository;
pub use favorites::SqliteFavoritesRepository;
pub use stories::{DEFAULT_PAGE_LIMIT, SqliteStoriesRepository};
pub use traits::{
    CategoriesRepository, FavoritesRepository, StoriesRepository, StoryPage, StoryQuery,
    StoryStats,
};

//! Database entities.
//!
//! Integer autoincrement primary keys throughout. Composite uniqueness
//! (ingredient name/unit, user/recipe bookmark pairs, follower/following)
//! is enforced by unique indexes created in [`crate::database::sync_schema`].

pub mod auth_token;
pub mod cart_entry;
pub mod favorite;
pub mod follow;
pub mod ingredient;
pub mod recipe;
pub mod recipe_ingredient;
pub mod user;

pub use auth_token::Entity as AuthToken;
pub use cart_entry::Entity as CartEntry;
pub use favorite::Entity as Favorite;
pub use follow::Entity as Follow;
pub use ingredient::Entity as Ingredient;
pub use recipe::Entity as Recipe;
pub use recipe_ingredient::Entity as RecipeIngredient;
pub use user::Entity as User;

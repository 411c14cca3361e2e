pub mod ingredients;
pub mod media;
pub mod recipes;
pub mod shopping_cart;
pub mod users;

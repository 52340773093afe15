//! Entity module - SeaORM entity definitions for the local store.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod category;
pub mod goal;
pub mod saving;
pub mod system_state;

// Re-export specific types to avoid conflicts
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use goal::{Column as GoalColumn, Entity as Goal, Model as GoalModel};
pub use saving::{Column as SavingColumn, Entity as Saving, Model as SavingModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};

pub mod crud;
pub mod questions;

pub use crud::CrudService;
pub use questions::QuestionStore;

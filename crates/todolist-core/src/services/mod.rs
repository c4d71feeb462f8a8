//! Services shared by front ends

mod todolist;

pub use todolist::TodoList;

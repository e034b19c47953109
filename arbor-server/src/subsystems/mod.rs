pub mod branches;
pub mod fragments;
pub mod linker;
pub mod tree;
pub mod visualize;

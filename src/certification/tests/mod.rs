mod common;

mod catalog;
mod service;

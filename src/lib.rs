#![allow(async_fn_in_trait)]

pub mod common;
pub mod config;
pub mod constants;
pub mod domain;
pub mod evaluator;
pub mod factors;
pub mod mail;
pub mod portal;
pub mod processor;
pub mod replay;
pub mod report;
pub mod retry;
pub mod run;
pub mod sheets;
pub mod validator;

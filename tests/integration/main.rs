mod common;

mod a2a_client_test;
mod chat_test;
mod health_test;

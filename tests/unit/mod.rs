mod common;
mod options_tests;
mod subscriber_tests;

mod campaign_tests;
mod common;

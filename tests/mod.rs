//! Test suite for Chatline
//!
//! This module organizes all tests

pub mod property;

//! End-to-end physics scenarios driven through the public `World` API

mod scenarios;

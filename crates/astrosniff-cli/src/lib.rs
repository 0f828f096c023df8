//! Library surface of the `astrosniff` binary: the API route lives here so
//! contract tests can stand it up without spawning the process.

pub mod api;

pub(crate) mod logging;
mod solving;

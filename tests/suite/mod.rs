mod create;
mod failures;
mod logging;

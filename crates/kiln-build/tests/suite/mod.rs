mod bench;
mod materialize;
mod pipeline;

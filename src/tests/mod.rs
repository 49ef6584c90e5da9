mod support;

mod queue;

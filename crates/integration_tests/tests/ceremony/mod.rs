mod flow;
mod tampering;

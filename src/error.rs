use std::io;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// bad configuration value, reported before any frame flows
        InvalidArgument(msg: String) {
            display("invalid argument: {}", msg)
        }
        Io(err: io::Error) {
            from()
            display("i/o error: {}", err)
            cause(err)
        }
        /// scheduler priority or memory locking was refused by the OS
        RealtimeConfig(msg: String) {
            display("realtime configuration failed: {}", msg)
        }
    }
}

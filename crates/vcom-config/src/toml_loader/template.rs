/// Generate the default TOML config content with comments.
pub(super) fn default_config_toml() -> String {
    r##"# vcom configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.
# Command-line flags take precedence over this file.

[device]
# path = "/tmp/vcom0"          # symlink published for applications

[serial]
# baudrate = 115200            # 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600
# data_bits = 8                # 5-8
# stop_bits = 1                # 1 or 2
# parity = "none"              # none, odd, even
# flow_control = false         # RTS/CTS

[remote]
# host = "127.0.0.1"
# port = 8080
# max_reconnect_attempts = 5   # 1-100
# reconnect_backoff_secs = 5   # 0-3600

[logging]
# debug = false                # log every forwarded chunk
"##
    .to_string()
}

//! Line-config translator: serial parameters → termios applied to the pty master.

use std::os::fd::AsFd;

use nix::sys::termios::{
    self, BaudRate as TermiosBaud, ControlFlags, FlushArg, InputFlags, LocalFlags, OutputFlags,
    SetArg, SpecialCharacterIndices, Termios,
};
use vcom_config::{BaudRate, DataBits, Parity, SerialSettings, StopBits};

use crate::constants::READ_TIMEOUT_DECISECONDS;
use crate::error::TunnelError;

/// Map a supported rate onto the termios speed constant.
pub fn termios_baud(baud: BaudRate) -> TermiosBaud {
    match baud {
        BaudRate::B9600 => TermiosBaud::B9600,
        BaudRate::B19200 => TermiosBaud::B19200,
        BaudRate::B38400 => TermiosBaud::B38400,
        BaudRate::B57600 => TermiosBaud::B57600,
        BaudRate::B115200 => TermiosBaud::B115200,
        BaudRate::B230400 => TermiosBaud::B230400,
        BaudRate::B460800 => TermiosBaud::B460800,
        BaudRate::B921600 => TermiosBaud::B921600,
    }
}

fn char_size(bits: DataBits) -> ControlFlags {
    match bits {
        DataBits::Five => ControlFlags::CS5,
        DataBits::Six => ControlFlags::CS6,
        DataBits::Seven => ControlFlags::CS7,
        DataBits::Eight => ControlFlags::CS8,
    }
}

/// Rewrite `termios` for `settings`: raw mode, speed, framing, parity,
/// flow control and a timed (VMIN 0, VTIME 10) read.
pub fn configure(mut termios: Termios, settings: &SerialSettings) -> Result<Termios, TunnelError> {
    // Raw mode.
    termios.local_flags &=
        !(LocalFlags::ICANON | LocalFlags::ECHO | LocalFlags::ECHOE | LocalFlags::ISIG);
    termios.output_flags &= !OutputFlags::OPOST;
    termios.input_flags &= !(InputFlags::IGNBRK
        | InputFlags::BRKINT
        | InputFlags::PARMRK
        | InputFlags::ISTRIP
        | InputFlags::INLCR
        | InputFlags::IGNCR
        | InputFlags::ICRNL
        | InputFlags::IXON);

    let speed = termios_baud(settings.baud);
    termios::cfsetispeed(&mut termios, speed)
        .map_err(|source| TunnelError::LineConfig { phase: "cfsetispeed", source })?;
    termios::cfsetospeed(&mut termios, speed)
        .map_err(|source| TunnelError::LineConfig { phase: "cfsetospeed", source })?;

    termios.control_flags &= !ControlFlags::CSIZE;
    termios.control_flags |= char_size(settings.data_bits);

    if settings.stop_bits == StopBits::Two {
        termios.control_flags |= ControlFlags::CSTOPB;
    } else {
        termios.control_flags &= !ControlFlags::CSTOPB;
    }

    match settings.parity {
        Parity::Odd => {
            termios.control_flags |= ControlFlags::PARENB | ControlFlags::PARODD;
            termios.input_flags |= InputFlags::INPCK;
        }
        Parity::Even => {
            termios.control_flags |= ControlFlags::PARENB;
            termios.control_flags &= !ControlFlags::PARODD;
            termios.input_flags |= InputFlags::INPCK;
        }
        Parity::None => {
            termios.control_flags &= !(ControlFlags::PARENB | ControlFlags::PARODD);
            termios.input_flags &= !InputFlags::INPCK;
        }
    }

    if settings.flow_control {
        termios.control_flags |= ControlFlags::CRTSCTS;
    } else {
        termios.control_flags &= !ControlFlags::CRTSCTS;
        termios.input_flags &= !(InputFlags::IXON | InputFlags::IXOFF | InputFlags::IXANY);
    }

    termios.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
    termios.control_chars[SpecialCharacterIndices::VTIME as usize] = READ_TIMEOUT_DECISECONDS;

    Ok(termios)
}

/// Apply `settings` to an open pty master and flush both queues.
pub fn apply<Fd: AsFd>(fd: &Fd, settings: &SerialSettings) -> Result<(), TunnelError> {
    let fd = fd.as_fd();

    let current = termios::tcgetattr(fd)
        .map_err(|source| TunnelError::LineConfig { phase: "tcgetattr", source })?;
    let wanted = configure(current, settings)?;

    termios::tcsetattr(fd, SetArg::TCSANOW, &wanted)
        .map_err(|source| TunnelError::LineConfig { phase: "tcsetattr", source })?;
    termios::tcflush(fd, FlushArg::TCIOFLUSH)
        .map_err(|source| TunnelError::LineConfig { phase: "tcflush", source })?;

    tracing::debug!(settings = %settings, "line configuration applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::fcntl::OFlag;
    use nix::pty::{grantpt, posix_openpt, unlockpt, PtyMaster};

    fn open_master() -> PtyMaster {
        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).expect("posix_openpt");
        grantpt(&master).expect("grantpt");
        unlockpt(&master).expect("unlockpt");
        master
    }

    fn base_termios() -> Termios {
        let master = open_master();
        termios::tcgetattr(&master).expect("tcgetattr")
    }

    fn settings_for_rate(rate: u32) -> SerialSettings {
        vcom_config::SerialConfig {
            baudrate: rate,
            ..Default::default()
        }
        .settings()
    }

    #[test]
    fn enumerated_rates_map_to_matching_speed() {
        let cases = [
            (9600, TermiosBaud::B9600),
            (19200, TermiosBaud::B19200),
            (38400, TermiosBaud::B38400),
            (57600, TermiosBaud::B57600),
            (115200, TermiosBaud::B115200),
            (230400, TermiosBaud::B230400),
            (460800, TermiosBaud::B460800),
            (921600, TermiosBaud::B921600),
        ];
        for (rate, expected) in cases {
            let t = configure(base_termios(), &settings_for_rate(rate)).unwrap();
            assert_eq!(termios::cfgetispeed(&t), expected, "input speed for {rate}");
            assert_eq!(termios::cfgetospeed(&t), expected, "output speed for {rate}");
        }
    }

    #[test]
    fn unsupported_rate_uses_115200() {
        let t = configure(base_termios(), &settings_for_rate(12345)).unwrap();
        assert_eq!(termios::cfgetospeed(&t), TermiosBaud::B115200);
        assert_eq!(termios::cfgetispeed(&t), TermiosBaud::B115200);
    }

    #[test]
    fn raw_mode_flags_are_cleared() {
        let t = configure(base_termios(), &SerialSettings::default()).unwrap();
        assert!(!t.local_flags.contains(LocalFlags::ICANON));
        assert!(!t.local_flags.contains(LocalFlags::ECHO));
        assert!(!t.local_flags.contains(LocalFlags::ISIG));
        assert!(!t.output_flags.contains(OutputFlags::OPOST));
        assert!(!t.input_flags.contains(InputFlags::ICRNL));
        assert_eq!(t.control_chars[SpecialCharacterIndices::VMIN as usize], 0);
        assert_eq!(t.control_chars[SpecialCharacterIndices::VTIME as usize], 10);
    }

    #[test]
    fn default_framing_is_8n1_without_flow_control() {
        let t = configure(base_termios(), &SerialSettings::default()).unwrap();
        assert_eq!(t.control_flags & ControlFlags::CSIZE, ControlFlags::CS8);
        assert!(!t.control_flags.contains(ControlFlags::CSTOPB));
        assert!(!t.control_flags.contains(ControlFlags::PARENB));
        assert!(!t.control_flags.contains(ControlFlags::CRTSCTS));
        assert!(!t.input_flags.contains(InputFlags::IXON));
        assert!(!t.input_flags.contains(InputFlags::IXOFF));
        assert!(!t.input_flags.contains(InputFlags::IXANY));
    }

    #[test]
    fn seven_odd_two_with_flow_control() {
        let settings = SerialSettings {
            baud: BaudRate::B9600,
            data_bits: DataBits::Seven,
            stop_bits: StopBits::Two,
            parity: Parity::Odd,
            flow_control: true,
        };
        let t = configure(base_termios(), &settings).unwrap();
        assert_eq!(t.control_flags & ControlFlags::CSIZE, ControlFlags::CS7);
        assert!(t.control_flags.contains(ControlFlags::CSTOPB));
        assert!(t.control_flags.contains(ControlFlags::PARENB));
        assert!(t.control_flags.contains(ControlFlags::PARODD));
        assert!(t.input_flags.contains(InputFlags::INPCK));
        assert!(t.control_flags.contains(ControlFlags::CRTSCTS));
    }

    #[test]
    fn even_parity_clears_parodd() {
        let settings = SerialSettings {
            parity: Parity::Even,
            data_bits: DataBits::Five,
            ..SerialSettings::default()
        };
        let t = configure(base_termios(), &settings).unwrap();
        assert_eq!(t.control_flags & ControlFlags::CSIZE, ControlFlags::CS5);
        assert!(t.control_flags.contains(ControlFlags::PARENB));
        assert!(!t.control_flags.contains(ControlFlags::PARODD));
    }

    #[test]
    fn apply_sets_raw_mode_on_master() {
        let master = open_master();
        apply(&master, &SerialSettings::default()).unwrap();
        let t = termios::tcgetattr(&master).unwrap();
        assert!(!t.local_flags.contains(LocalFlags::ICANON));
        assert!(!t.local_flags.contains(LocalFlags::ECHO));
    }

    #[test]
    fn apply_to_non_terminal_fails() {
        let file = tempfile::tempfile().unwrap();
        let err = apply(&file, &SerialSettings::default()).unwrap_err();
        assert!(matches!(err, TunnelError::LineConfig { phase: "tcgetattr", .. }));
    }
}

// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;
use std::time::Duration;

use io_error::*;

/// Socket options and the value they are set to.
/// Timeouts set to `None` mean "wait forever".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketOption {
    /// Maximum time spent flushing pending sends when the socket is closed.
    Linger(Duration),
    /// Outgoing buffer limit, in bytes, applied per pipe.
    SendBuffer(usize),
    /// Incoming buffer limit, in bytes, applied per pipe.
    RecvBuffer(usize),
    /// Deadline of the blocking send operation.
    SendTimeout(Option<Duration>),
    /// Deadline of the blocking receive operation.
    RecvTimeout(Option<Duration>),
    /// Delay before a disconnected endpoint tries to establish again.
    ReconnectInterval(Duration),
    /// Upper bound of the reconnect backoff.
    ReconnectIntervalMax(Duration),
    /// Priority class applied to endpoints created afterwards, for sending. 1 is first, 16 is last.
    SendPriority(u8),
    /// Priority class applied to endpoints created afterwards, for receiving. 1 is first, 16 is last.
    RecvPriority(u8),
    /// Restricts name resolution to IPv4 addresses.
    Ipv4Only(bool),
    /// Label used in diagnostics.
    SocketName(String),
    /// Maximum hop count a message can make before being dropped.
    MaxTtl(u8),
    /// How long survey responses are accepted after the survey is sent.
    SurveyDeadline(Duration),
    /// How long a request waits for its reply before being sent again.
    ResendInterval(Duration),
    /// Messages larger than this are dropped at the pipe boundary.
    RecvMaxSize(usize),
    /// Adds a topic to the subscription set.
    Subscribe(String),
    /// Removes a topic from the subscription set.
    Unsubscribe(String)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SocketOptionKind {
    Linger,
    SendBuffer,
    RecvBuffer,
    SendTimeout,
    RecvTimeout,
    ReconnectInterval,
    ReconnectIntervalMax,
    SendPriority,
    RecvPriority,
    Ipv4Only,
    SocketName,
    MaxTtl,
    SurveyDeadline,
    ResendInterval,
    RecvMaxSize
}

/// Per-socket storage of the options handled by the socket base.
/// Pattern specific options are routed to the protocol instead.
pub struct Config {
    pub linger: Duration,
    pub send_buffer: usize,
    pub recv_buffer: usize,
    pub send_timeout: Option<Duration>,
    pub recv_timeout: Option<Duration>,
    pub reconnect_ivl: Duration,
    pub reconnect_ivl_max: Duration,
    pub send_priority: u8,
    pub recv_priority: u8,
    pub ipv4_only: bool,
    pub socket_name: Option<String>,
    pub max_ttl: u8,
    pub recv_max_size: usize
}

impl Default for Config {
    fn default() -> Config {
        Config {
            linger: Duration::from_millis(1000),
            send_buffer: 128 * 1024,
            recv_buffer: 128 * 1024,
            send_timeout: None,
            recv_timeout: None,
            reconnect_ivl: Duration::from_millis(100),
            reconnect_ivl_max: Duration::from_millis(0),
            send_priority: 8,
            recv_priority: 8,
            ipv4_only: true,
            socket_name: None,
            max_ttl: 8,
            recv_max_size: 1024 * 1024
        }
    }
}

impl Config {
    pub fn set(&mut self, opt: &SocketOption) -> io::Result<()> {
        match *opt {
            SocketOption::Linger(value) => self.linger = value,
            SocketOption::SendBuffer(value) => self.send_buffer = check_buffer(value)?,
            SocketOption::RecvBuffer(value) => self.recv_buffer = check_buffer(value)?,
            SocketOption::SendTimeout(value) => self.send_timeout = value,
            SocketOption::RecvTimeout(value) => self.recv_timeout = value,
            SocketOption::ReconnectInterval(value) => self.reconnect_ivl = value,
            SocketOption::ReconnectIntervalMax(value) => self.reconnect_ivl_max = value,
            SocketOption::SendPriority(value) => self.send_priority = check_priority(value)?,
            SocketOption::RecvPriority(value) => self.recv_priority = check_priority(value)?,
            SocketOption::Ipv4Only(value) => self.ipv4_only = value,
            SocketOption::SocketName(ref value) => self.socket_name = Some(value.clone()),
            SocketOption::MaxTtl(value) => self.max_ttl = value,
            SocketOption::RecvMaxSize(value) => self.recv_max_size = value,
            SocketOption::SurveyDeadline(_) |
            SocketOption::ResendInterval(_) |
            SocketOption::Subscribe(_) |
            SocketOption::Unsubscribe(_) => return Err(invalid_input_io_error("option not handled by the socket base"))
        }

        Ok(())
    }

    pub fn get(&self, kind: SocketOptionKind) -> io::Result<SocketOption> {
        match kind {
            SocketOptionKind::Linger => Ok(SocketOption::Linger(self.linger)),
            SocketOptionKind::SendBuffer => Ok(SocketOption::SendBuffer(self.send_buffer)),
            SocketOptionKind::RecvBuffer => Ok(SocketOption::RecvBuffer(self.recv_buffer)),
            SocketOptionKind::SendTimeout => Ok(SocketOption::SendTimeout(self.send_timeout)),
            SocketOptionKind::RecvTimeout => Ok(SocketOption::RecvTimeout(self.recv_timeout)),
            SocketOptionKind::ReconnectInterval => Ok(SocketOption::ReconnectInterval(self.reconnect_ivl)),
            SocketOptionKind::ReconnectIntervalMax => Ok(SocketOption::ReconnectIntervalMax(self.reconnect_ivl_max)),
            SocketOptionKind::SendPriority => Ok(SocketOption::SendPriority(self.send_priority)),
            SocketOptionKind::RecvPriority => Ok(SocketOption::RecvPriority(self.recv_priority)),
            SocketOptionKind::Ipv4Only => Ok(SocketOption::Ipv4Only(self.ipv4_only)),
            SocketOptionKind::SocketName => match self.socket_name {
                Some(ref name) => Ok(SocketOption::SocketName(name.clone())),
                None => Ok(SocketOption::SocketName(String::new()))
            },
            SocketOptionKind::MaxTtl => Ok(SocketOption::MaxTtl(self.max_ttl)),
            SocketOptionKind::RecvMaxSize => Ok(SocketOption::RecvMaxSize(self.recv_max_size)),
            SocketOptionKind::SurveyDeadline |
            SocketOptionKind::ResendInterval => Err(invalid_input_io_error("option not handled by the socket base"))
        }
    }
}

fn check_priority(value: u8) -> io::Result<u8> {
    if value >= 1 && value <= 16 {
        Ok(value)
    } else {
        Err(invalid_input_io_error("priority must be between 1 and 16"))
    }
}

fn check_buffer(value: usize) -> io::Result<usize> {
    if value > 0 {
        Ok(value)
    } else {
        Err(invalid_input_io_error("buffer size must not be zero"))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn options_can_be_set_and_read_back() {
        let mut config = Config::default();

        config.set(&SocketOption::SendTimeout(Some(Duration::from_millis(250)))).expect("set");
        config.set(&SocketOption::SendPriority(2)).expect("set");

        assert_eq!(
            SocketOption::SendTimeout(Some(Duration::from_millis(250))),
            config.get(SocketOptionKind::SendTimeout).expect("get"));
        assert_eq!(
            SocketOption::SendPriority(2),
            config.get(SocketOptionKind::SendPriority).expect("get"));
    }

    #[test]
    fn out_of_range_priority_is_rejected() {
        let mut config = Config::default();

        assert!(config.set(&SocketOption::SendPriority(0)).is_err());
        assert!(config.set(&SocketOption::RecvPriority(17)).is_err());
        assert_eq!(8, config.send_priority);
    }

    #[test]
    fn pattern_options_are_not_handled_by_the_base() {
        let mut config = Config::default();

        assert!(config.set(&SocketOption::Subscribe("topic".to_string())).is_err());
        assert!(config.set(&SocketOption::SurveyDeadline(Duration::from_millis(100))).is_err());
    }
}

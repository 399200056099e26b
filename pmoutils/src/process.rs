use netstat2::{AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, get_sockets_info};
use sysinfo::{Pid, System};

/// A process listening on a TCP port.
#[derive(Debug, Clone)]
pub struct ProcessPortInfo {
    pub pid: u32,
    pub process_name: String,
    pub owner: String,
    pub port: u16,
}

impl std::fmt::Display for ProcessPortInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (pid {}, user {}) on port {}",
            self.process_name, self.pid, self.owner, self.port
        )
    }
}

/// Find the process holding TCP `port`, if it can be identified.
pub fn find_process_using_port(port: u16) -> Option<ProcessPortInfo> {
    let sockets = get_sockets_info(
        AddressFamilyFlags::IPV4 | AddressFamilyFlags::IPV6,
        ProtocolFlags::TCP,
    )
    .ok()?;

    let mut system = System::new_all();
    system.refresh_all();

    sockets.into_iter().find_map(|socket| match socket.protocol_socket_info {
        ProtocolSocketInfo::Tcp(ref tcp) if tcp.local_port == port => {
            build_process_info(&system, port, socket.associated_pids.first())
        }
        _ => None,
    })
}

fn build_process_info(system: &System, port: u16, pid: Option<&u32>) -> Option<ProcessPortInfo> {
    let pid = *pid?;
    let process = system.process(Pid::from_u32(pid))?;

    let owner = process
        .user_id()
        .and_then(|uid| {
            users::get_user_by_uid(**uid).map(|user| user.name().to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "unknown".to_string());

    Some(ProcessPortInfo {
        pid,
        process_name: process.name().to_string(),
        owner,
        port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_finds_own_listener_when_visible() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        // socket tables may be unreadable in restricted environments
        if let Some(info) = find_process_using_port(port) {
            assert_eq!(info.port, port);
            assert_eq!(info.pid, std::process::id());
            assert!(info.to_string().contains(&port.to_string()));
        }
    }
}

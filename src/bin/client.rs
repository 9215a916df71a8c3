use std::env;
use std::io::{self, Read};
use std::net::SocketAddr;

use reliable_udp::Endpoint;

const MESSAGE_LEN: usize = 1024;

fn main() {
    env_logger::init();

    let mut args = env::args().skip(1);
    let local: SocketAddr = args
        .next()
        .expect("usage: client <local-addr> <remote-addr>")
        .parse()
        .expect("invalid local address");
    let remote: SocketAddr = args
        .next()
        .expect("usage: client <local-addr> <remote-addr>")
        .parse()
        .expect("invalid remote address");

    let mut endpoint = Endpoint::connect(local, remote).expect("failed to bind endpoint");

    println!(">>> connected {local} -> {remote}");

    let mut stdin = io::stdin().lock();

    loop {
        let mut chunk = vec![0u8; MESSAGE_LEN];
        let n = stdin.read(&mut chunk).expect("failed to read stdin");

        if n == 0 {
            break;
        }

        chunk.truncate(n);
        chunk.resize(MESSAGE_LEN, 0);

        if let Err(err) = endpoint.submit(&chunk) {
            eprintln!(">>> submit failed: {err}");
            break;
        }

        let echoed = match endpoint.consume(MESSAGE_LEN) {
            Ok(data) => data,
            Err(err) => {
                eprintln!(">>> consume failed: {err}");
                break;
            }
        };

        println!(
            ">>> echoed {:?}",
            String::from_utf8_lossy(&echoed[..n])
        );
    }

    endpoint.close().ok();
}

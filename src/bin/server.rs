use std::env;
use std::net::SocketAddr;

use reliable_udp::Endpoint;

const MESSAGE_LEN: usize = 1024;

fn main() {
    env_logger::init();

    let mut args = env::args().skip(1);
    let local: SocketAddr = args
        .next()
        .expect("usage: server <local-addr> <remote-addr>")
        .parse()
        .expect("invalid local address");
    let remote: SocketAddr = args
        .next()
        .expect("usage: server <local-addr> <remote-addr>")
        .parse()
        .expect("invalid remote address");

    let mut endpoint = Endpoint::connect(local, remote).expect("failed to bind endpoint");

    println!(">>> listening on {local}, peer {remote}");

    loop {
        let data = match endpoint.consume(MESSAGE_LEN) {
            Ok(data) => data,
            Err(err) => {
                eprintln!(">>> consume failed: {err}");
                break;
            }
        };

        println!(">>> received {} bytes, echoing back", data.len());

        if let Err(err) = endpoint.submit(&data) {
            eprintln!(">>> submit failed: {err}");
            break;
        }
    }
}

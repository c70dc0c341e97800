#![allow(dead_code)]

pub mod test_server {
    use std::net::TcpListener;
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    /// An address with a port that was free a moment ago.
    pub fn free_addr() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    }
}

pub mod http {
    use serde_json::Value;
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    pub struct HttpReply {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl HttpReply {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }

        pub fn json(&self) -> Value {
            serde_json::from_str(&self.body).unwrap()
        }
    }

    /// Send one request on a fresh connection and read the full reply.
    pub fn send_request(addr: SocketAddr, method: &str, target: &str, headers: &[(&str, &str)], body: &str) -> HttpReply {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut request = format!("{method} {target} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
        for (name, value) in headers {
            request.push_str(&format!("{name}: {value}\r\n"));
        }
        request.push_str(&format!("Content-Length: {}\r\n\r\n{body}", body.len()));
        stream.write_all(request.as_bytes()).unwrap();
        read_reply(&mut stream)
    }

    pub fn get(addr: SocketAddr, target: &str) -> HttpReply {
        send_request(addr, "GET", target, &[], "")
    }

    fn read_reply(stream: &mut TcpStream) -> HttpReply {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = match stream.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);
            if let Some(reply) = parse_response(&buf) {
                return reply;
            }
        }
        parse_response(&buf).expect("incomplete HTTP response")
    }

    /// Parse a complete response, or `None` if more bytes are needed.
    pub fn parse_response(buf: &[u8]) -> Option<HttpReply> {
        let text = String::from_utf8_lossy(buf);
        let (head, rest) = text.split_once("\r\n\r\n")?;
        let mut lines = head.lines();
        let status = lines.next()?.split_whitespace().nth(1)?.parse().ok()?;
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        let length: usize = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        if rest.len() < length {
            return None;
        }
        Some(HttpReply {
            status,
            headers,
            body: rest[..length].to_string(),
        })
    }
}

pub mod tcp {
    use std::io::{BufRead, BufReader, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;
    use switchyard::server::{RequestFrame, ResponseFrame};

    /// Line-oriented frame client.
    pub struct FrameClient {
        reader: BufReader<TcpStream>,
        writer: TcpStream,
    }

    impl FrameClient {
        pub fn connect(addr: SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).unwrap();
            stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
            Self {
                reader: BufReader::new(stream.try_clone().unwrap()),
                writer: stream,
            }
        }

        pub fn send_line(&mut self, line: &str) -> ResponseFrame {
            self.writer.write_all(line.as_bytes()).unwrap();
            self.writer.write_all(b"\n").unwrap();
            let mut reply = String::new();
            self.reader.read_line(&mut reply).unwrap();
            serde_json::from_str(&reply).unwrap()
        }

        pub fn send(&mut self, frame: &RequestFrame) -> ResponseFrame {
            self.send_line(&serde_json::to_string(frame).unwrap())
        }

        /// Write `bytes` as-is and read one reply.
        pub fn send_raw(&mut self, bytes: &[u8]) -> ResponseFrame {
            self.writer.write_all(bytes).unwrap();
            let mut reply = String::new();
            self.reader.read_line(&mut reply).unwrap();
            serde_json::from_str(&reply).unwrap()
        }

        /// Whether the server has closed the connection.
        pub fn closed(&mut self) -> bool {
            let mut rest = String::new();
            matches!(self.reader.read_line(&mut rest), Ok(0) | Err(_))
        }
    }
}

pub mod fixtures {
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use switchyard::binder::{Args, RequestContext};
    use switchyard::dispatcher::HandlerResponse;
    use switchyard::registry::{GroupRoutes, HandlerGroup, Mapping};
    use switchyard::router::{ParamSource, ParamSpec, TargetType};

    /// Small order-management group used across integration tests.
    #[derive(Default)]
    pub struct Orders {
        pub calls: AtomicUsize,
    }

    impl Orders {
        fn list(&self, args: Args) -> anyhow::Result<HandlerResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let limit: u32 = args.get("limit")?;
            let status: Vec<String> = args.get("status")?;
            Ok(HandlerResponse::json(200, json!({ "limit": limit, "status": status })))
        }

        fn get(&self, args: Args) -> anyhow::Result<HandlerResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let id: u64 = args.get("id")?;
            let ctx: RequestContext = args.get("ctx")?;
            Ok(HandlerResponse::json(
                200,
                json!({ "id": id, "request_id": ctx.request_id.to_string() }),
            ))
        }

        fn create(&self, args: Args) -> anyhow::Result<HandlerResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let sku: String = args.get("sku")?;
            let qty: i32 = args.get("qty")?;
            Ok(HandlerResponse::json(201, json!({ "sku": sku, "qty": qty })))
        }

        fn slow(&self, args: Args) -> anyhow::Result<HandlerResponse> {
            let ms: u64 = args.get("ms")?;
            may::coroutine::sleep(std::time::Duration::from_millis(ms));
            Ok(HandlerResponse::json(200, json!({ "slept": ms })))
        }

        fn fail(&self, _: Args) -> anyhow::Result<HandlerResponse> {
            anyhow::bail!("warehouse unreachable")
        }
    }

    impl HandlerGroup for Orders {
        fn declare(&self, group: &mut GroupRoutes<Self>) {
            group.prefix("/orders");
            group
                .action("list", Orders::list)
                .mapping(Mapping::get("/"))
                .param(ParamSpec::query("limit", TargetType::U32).with_default("20"))
                .param(ParamSpec::array("status", ParamSource::Query, TargetType::Str).optional());
            group
                .action("get", Orders::get)
                .mapping(Mapping::get("/{id}"))
                .params([ParamSpec::path("id", TargetType::U64), ParamSpec::context("ctx")]);
            group
                .action("create", Orders::create)
                .mapping(Mapping::post("/"))
                .params([
                    ParamSpec::body("sku", TargetType::Str),
                    ParamSpec::body("qty", TargetType::I32),
                ]);
            group
                .action("slow", Orders::slow)
                .mapping(Mapping::get("/slow"))
                .param(ParamSpec::query("ms", TargetType::U64));
            group.action("fail", Orders::fail).mapping(Mapping::get("/fail"));
        }
    }
}

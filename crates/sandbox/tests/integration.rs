#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;

    use async_trait::async_trait;
    use e14z_config::Config;
    use e14z_errors::{Error, ExecError, SecurityError};
    use e14z_sandbox::{
        ChildSession, CommandSanitizer, ExecOutput, ExecRequest, ExitState, McpProbe,
        ProcessRunner, SandboxedExecutor,
    };
    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;

    /// Answers JSON-RPC requests from a table, with log noise in between
    struct ScriptedSession {
        results: HashMap<&'static str, Result<Value, &'static str>>,
        pending: VecDeque<String>,
        sent: Vec<Value>,
    }

    impl ScriptedSession {
        fn new() -> Self {
            let mut results = HashMap::new();
            results.insert(
                "initialize",
                Ok(json!({
                    "protocolVersion": "2024-11-05",
                    "serverInfo": { "name": "time-server", "version": "1.2.0" },
                    "capabilities": {}
                })),
            );
            results.insert(
                "tools/list",
                Ok(json!({
                    "tools": [{
                        "name": "get_current_time",
                        "description": "Get the time",
                        "inputSchema": { "properties": { "timezone": {} } }
                    }]
                })),
            );
            results.insert("resources/list", Ok(json!({ "resources": [{}, {}] })));
            results.insert("prompts/list", Err("Method not found"));
            Self {
                results,
                pending: VecDeque::new(),
                sent: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl ChildSession for ScriptedSession {
        async fn send_line(&mut self, line: &str) -> Result<(), Error> {
            let message: Value = serde_json::from_str(line).unwrap();
            self.sent.push(message.clone());
            let (Some(id), Some(method)) = (message.get("id"), message["method"].as_str())
            else {
                return Ok(());
            };
            self.pending.push_back("server starting...".to_string());
            self.pending
                .push_back(json!({ "jsonrpc": "2.0", "id": 999, "result": {} }).to_string());
            let response = match self.results.get(method) {
                Some(Ok(result)) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
                Some(Err(message)) => json!({
                    "jsonrpc": "2.0", "id": id, "error": { "code": -32601, "message": message }
                }),
                None => return Ok(()),
            };
            self.pending.push_back(response.to_string());
            Ok(())
        }

        async fn read_line(&mut self, _timeout: Duration) -> Result<Option<String>, Error> {
            Ok(self.pending.pop_front())
        }

        async fn finish(self: Box<Self>) -> Result<ExecOutput, Error> {
            Ok(ExecOutput {
                status: ExitState::Exited(0),
                stdout: Vec::new(),
                stderr: Vec::new(),
                truncated: false,
                duration: Duration::ZERO,
            })
        }
    }

    #[tokio::test]
    async fn test_probe_lists_tools() {
        let mut session = ScriptedSession::new();
        let report = McpProbe::new().probe(&mut session).await.unwrap();

        assert_eq!(report.protocol_version.as_deref(), Some("2024-11-05"));
        assert_eq!(report.server_name.as_deref(), Some("time-server"));
        assert_eq!(report.tools.len(), 1);
        assert_eq!(report.tools[0].name, "get_current_time");
        assert_eq!(report.tools[0].parameters, vec!["timezone"]);
        assert_eq!(report.resources_count, 2);
        assert_eq!(report.prompts_count, 0);

        let methods: Vec<&str> = session
            .sent
            .iter()
            .filter_map(|m| m["method"].as_str())
            .collect();
        assert_eq!(
            methods,
            vec![
                "initialize",
                "notifications/initialized",
                "tools/list",
                "resources/list",
                "prompts/list"
            ]
        );
        assert_eq!(session.sent[0]["params"]["clientInfo"]["name"], "e14z");
        assert!(session.sent[1].get("id").is_none());
    }

    #[tokio::test]
    async fn test_probe_initialize_error() {
        let mut session = ScriptedSession::new();
        session.results.insert("initialize", Err("unsupported protocol"));
        let err = McpProbe::new().probe(&mut session).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Exec(ExecError::ProtocolFailed { ref message }) if message.contains("unsupported protocol")
        ));
    }

    #[tokio::test]
    async fn test_probe_eof() {
        let mut session = ScriptedSession::new();
        session.results.remove("tools/list");
        let err = McpProbe::new().probe(&mut session).await.unwrap_err();
        assert!(matches!(err, Error::Exec(ExecError::ProtocolFailed { .. })));
    }

    fn test_executor() -> SandboxedExecutor {
        let mut config = Config::default();
        config.sandbox.kill_grace_ms = 200;
        config.sandbox.max_output_bytes = 64;
        SandboxedExecutor::new(&config).with_sanitizer(CommandSanitizer::new([
            "sh", "sleep", "cat", "head", "env",
        ]))
    }

    #[tokio::test]
    async fn test_rejected_before_spawn() {
        let executor = SandboxedExecutor::new(&Config::default());
        let err = executor
            .run(ExecRequest::new("node; rm -rf /"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Security(SecurityError::UnsafeCommand { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_output_and_exit_code() {
        let executor = test_executor();
        let output = executor
            .run(
                ExecRequest::new("sh").args(["-c", "echo hello"]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout_lossy(), "hello\n");

        let output = executor
            .run(
                ExecRequest::new("sh").args(["-c", "exit 3"]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(output.code(), Some(3));
        assert!(output.check("sh").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_child() {
        let executor = test_executor();
        let output = executor
            .run(
                ExecRequest::new("sleep")
                    .arg("30")
                    .timeout(Duration::from_millis(200)),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(output.timed_out());
        assert!(output.duration < Duration::from_secs(5));
        assert!(matches!(
            output.check("sleep"),
            Err(Error::Exec(ExecError::Timeout { .. }))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_kills_child() {
        let executor = test_executor();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let output = executor
            .run(ExecRequest::new("sleep").arg("30"), cancel)
            .await
            .unwrap();
        assert_eq!(output.status, ExitState::Cancelled);
        assert!(matches!(output.check("sleep"), Err(Error::Cancelled)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_environment_is_scrubbed() {
        std::env::set_var("E14Z_HOST_ONLY_SECRET", "leak");
        let executor = test_executor();
        let output = executor
            .run(
                ExecRequest::new("env").env("E14Z_GIVEN", "yes"),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let env = output.stdout_lossy();
        assert!(env.contains("E14Z_GIVEN=yes"));
        assert!(!env.contains("E14Z_HOST_ONLY_SECRET"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_is_bounded() {
        let executor = test_executor();
        let output = executor
            .run(
                ExecRequest::new("head").args(["-c", "100000", "/dev/zero"]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(output.success());
        assert!(output.truncated);
        assert_eq!(output.stdout.len(), 64);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdin_is_fed() {
        let executor = test_executor();
        let output = executor
            .execute(ExecRequest::new("cat").stdin("ping"))
            .await
            .unwrap();
        assert_eq!(output.stdout_lossy(), "ping");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_round_trip() {
        let executor = test_executor();
        let mut session = executor
            .spawn(ExecRequest::new("cat"), CancellationToken::new())
            .await
            .unwrap();
        session.send_line("hello").await.unwrap();
        let line = session.read_line(Duration::from_secs(5)).await.unwrap();
        assert_eq!(line.as_deref(), Some("hello"));
        let output = session.finish().await.unwrap();
        assert!(output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_line_is_bounded() {
        let executor = test_executor();
        let mut session = executor
            .spawn(
                ExecRequest::new("head").args(["-c", "1048576", "/dev/zero"]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let err = session
            .read_line(Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Exec(ExecError::ProtocolFailed { .. })));
        let output = session.finish().await.unwrap();
        assert!(output.stdout.len() <= 64);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_line_at_limit_is_accepted() {
        let executor = test_executor();
        let line = "x".repeat(64);
        let mut session = executor
            .spawn(ExecRequest::new("cat"), CancellationToken::new())
            .await
            .unwrap();
        session.send_line(&line).await.unwrap();
        let read = session.read_line(Duration::from_secs(5)).await.unwrap();
        assert_eq!(read.as_deref(), Some(line.as_str()));
        session.finish().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_read_timeout() {
        let executor = test_executor();
        let mut session = executor
            .spawn(ExecRequest::new("cat"), CancellationToken::new())
            .await
            .unwrap();
        let err = session
            .read_line(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Exec(ExecError::Timeout { .. })));
        session.finish().await.unwrap();
    }
}

use replikv_core::{Command, ErrorCode, Request, Response};
use replikv_server::protocol::{
    decode_line, encode_line, parse, parse_line, read_message, render_text, write_message, Line,
};

#[test]
fn test_parse_set_command() {
    let result = parse("SET key value");
    assert!(result.is_ok());

    match result.unwrap() {
        Command::Put { key, value } => {
            assert_eq!(key, "key");
            assert_eq!(value, "value");
        }
        _ => panic!("Expected Put command"),
    }
}

#[test]
fn test_parse_get_command() {
    let result = parse("GET mykey");
    assert!(result.is_ok());

    match result.unwrap() {
        Command::Get { key } => {
            assert_eq!(key, "mykey");
        }
        _ => panic!("Expected Get command"),
    }
}

#[test]
fn test_parse_delete_command() {
    let result = parse("DELETE somekey");
    assert!(result.is_ok());

    match result.unwrap() {
        Command::Delete { key } => {
            assert_eq!(key, "somekey");
        }
        _ => panic!("Expected Delete command"),
    }
}

#[test]
fn test_parse_case_insensitive() {
    // Lowercase
    let result1 = parse("set key value");
    assert!(result1.is_ok());

    // Uppercase
    let result2 = parse("SET key value");
    assert!(result2.is_ok());

    // Mixed case
    let result3 = parse("SeT key value");
    assert!(result3.is_ok());
}

#[test]
fn test_parse_with_leading_trailing_whitespace() {
    let result = parse("  SET key value  ");
    assert!(result.is_ok());

    match result.unwrap() {
        Command::Put { key, value } => {
            assert_eq!(key, "key");
            assert_eq!(value, "value");
        }
        _ => panic!("Expected Put command"),
    }
}

#[test]
fn test_parse_with_extra_spaces() {
    let result = parse("SET   key   value");
    assert!(result.is_ok());

    match result.unwrap() {
        Command::Put { key, value } => {
            assert_eq!(key, "key");
            assert_eq!(value, "value");
        }
        _ => panic!("Expected Put command"),
    }
}

#[test]
fn test_parse_empty_command() {
    let result = parse("");
    assert!(result.is_err());
    assert_eq!(result.unwrap_err(), "Empty command");
}

#[test]
fn test_parse_whitespace_only() {
    let result = parse("   ");
    assert!(result.is_err());
    assert_eq!(result.unwrap_err(), "Empty command");
}

#[test]
fn test_parse_invalid_command() {
    let result = parse("INVALID");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("Invalid command"));
}

#[test]
fn test_parse_set_missing_value() {
    let result = parse("SET onlykey");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("Invalid command"));
}

#[test]
fn test_parse_get_missing_key() {
    let result = parse("GET");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("Invalid command"));
}

#[test]
fn test_parse_delete_missing_key() {
    let result = parse("DELETE");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("Invalid command"));
}

#[test]
fn test_parse_set_extra_args() {
    let result = parse("SET key value extra");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("Invalid command"));
}

#[test]
fn test_parse_get_extra_args() {
    let result = parse("GET key extra");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("Invalid command"));
}

#[test]
fn test_parse_delete_extra_args() {
    let result = parse("DELETE key extra");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("Invalid command"));
}

#[test]
fn test_parse_aliases() {
    assert!(matches!(parse("put k v"), Ok(Command::Put { .. })));
    assert!(matches!(parse("del k"), Ok(Command::Delete { .. })));
}

#[test]
fn test_parse_hyphenated_key_and_value() {
    let result = parse("SET my-key my-value");
    assert!(result.is_ok());

    match result.unwrap() {
        Command::Put { key, value } => {
            assert_eq!(key, "my-key");
            assert_eq!(value, "my-value");
        }
        _ => panic!("Expected Put command"),
    }
}

#[test]
fn test_parse_numeric_key_and_value() {
    let result = parse("SET 12345 67890");
    assert!(result.is_ok());

    match result.unwrap() {
        Command::Put { key, value } => {
            assert_eq!(key, "12345");
            assert_eq!(value, "67890");
        }
        _ => panic!("Expected Put command"),
    }
}

#[test]
fn test_parse_underscore_in_key() {
    let result = parse("SET my_key my_value");
    assert!(result.is_ok());

    match result.unwrap() {
        Command::Put { key, value } => {
            assert_eq!(key, "my_key");
            assert_eq!(value, "my_value");
        }
        _ => panic!("Expected Put command"),
    }
}

#[test]
fn test_parse_line_detects_json() {
    let line = r#"{"requester_id":1,"command":{"op":"put","key":"k","value":"v"}}"#;
    match parse_line(line) {
        Ok(Line::Json(request)) => {
            assert_eq!(request.requester_id, Some(1));
            assert_eq!(
                request.command,
                Command::Put {
                    key: "k".to_string(),
                    value: "v".to_string()
                }
            );
        }
        _ => panic!("Expected JSON request"),
    }
}

#[test]
fn test_parse_line_text_is_client_command() {
    match parse_line("GET k\n") {
        Ok(Line::Text(Command::Get { key })) => assert_eq!(key, "k"),
        _ => panic!("Expected text Get command"),
    }
}

#[test]
fn test_parse_line_bad_json() {
    let result = parse_line("{not json");
    assert!(result.is_err());
    assert!(result.err().unwrap().contains("Invalid request"));
}

#[test]
fn test_json_request_without_requester() {
    let request: Request = decode_line(r#"{"command":{"op":"delete","key":"k"}}"#).unwrap();
    assert_eq!(request.requester_id, None);
}

#[test]
fn test_encode_line_is_newline_terminated() {
    let bytes = encode_line(&Response::Get { value: None }).unwrap();
    assert_eq!(bytes.last(), Some(&b'\n'));
    let decoded: Response = decode_line(std::str::from_utf8(&bytes).unwrap()).unwrap();
    assert_eq!(decoded, Response::Get { value: None });
}

#[test]
fn test_render_text() {
    assert_eq!(render_text(&Response::Put { success: true }), "OK");
    assert_eq!(render_text(&Response::Delete { success: true }), "OK");
    assert_eq!(render_text(&Response::Delete { success: false }), "NOT_FOUND");
    assert_eq!(render_text(&Response::Get { value: None }), "NOT_FOUND");
    assert_eq!(render_text(&Response::Get { value: Some("v".to_string()) }), "v");
    assert_eq!(
        render_text(&Response::Error {
            code: ErrorCode::InvalidKey,
            message: "key cannot be empty".to_string()
        }),
        "ERROR: key cannot be empty"
    );
}

#[tokio::test]
async fn test_write_then_read_message() {
    let request = Request::from_peer(
        1,
        Command::Put {
            key: "k".to_string(),
            value: "v".to_string(),
        },
    );

    let mut buffer: Vec<u8> = Vec::new();
    write_message(&mut buffer, &request).await.unwrap();
    write_message(&mut buffer, &Response::Put { success: true }).await.unwrap();
    assert_eq!(buffer.iter().filter(|b| **b == b'\n').count(), 2);

    let mut reader = &buffer[..];
    let first: Option<Request> = read_message(&mut reader).await.unwrap();
    assert_eq!(first, Some(request));
    let second: Option<Response> = read_message(&mut reader).await.unwrap();
    assert_eq!(second, Some(Response::Put { success: true }));
    let end: Option<Response> = read_message(&mut reader).await.unwrap();
    assert_eq!(end, None);
}

#[tokio::test]
async fn test_read_message_rejects_garbage() {
    let mut reader: &[u8] = b"not json\n";
    let err = read_message::<_, Response>(&mut reader).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

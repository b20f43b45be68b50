// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use tempfile::TempDir;
use toolstream::config::{ProtocolConfig, Settings};

#[test]
fn test_settings_default_values() {
    let settings = Settings::default();

    assert_eq!(settings.protocol.start_tag, "<tool_call>");
    assert_eq!(settings.protocol.end_tag, "</tool_call>");
    assert_eq!(settings.protocol.tool_name_key, "tool");
    assert_eq!(settings.protocol.preview_chars, 100);
    assert!(settings.protocol.salvage_truncated);
    assert_eq!(settings.pipeline.lane_capacity, 64);
    assert!(settings.pipeline.expire_ephemeral);
}

#[test]
fn test_protocol_with_tags() {
    let protocol = ProtocolConfig::with_tags("<tag>", "</tag>", "cb_tool_name");
    assert_eq!(protocol.start_tag, "<tag>");
    assert_eq!(protocol.tool_name_key, "cb_tool_name");
    assert_eq!(protocol.preview_chars, 100);
}

#[test]
fn test_partial_settings_file_fills_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("settings.json");
    std::fs::write(&path, r#"{"protocol": {"start_tag": "<call>", "end_tag": "</call>"}}"#)
        .unwrap();

    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.protocol.start_tag, "<call>");
    assert_eq!(settings.protocol.tool_name_key, "tool");
    assert_eq!(settings.pipeline.lane_capacity, 64);
}

#[test]
fn test_invalid_settings_file_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("settings.json");
    std::fs::write(&path, r#"{"pipeline": {"lane_capacity": 0}}"#).unwrap();

    let err = Settings::load_from(&path).unwrap_err();
    assert!(err.to_string().contains("lane_capacity"));
}

#[test]
fn test_malformed_settings_file_is_json_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("settings.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = Settings::load_from(&path).unwrap_err();
    assert!(err.to_string().contains("JSON error"));
}

#[test]
fn test_settings_roundtrip_through_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("settings.json");

    let mut settings = Settings::default();
    settings.protocol.salvage_truncated = false;
    settings.pipeline.expire_ephemeral = false;
    settings.save_to(&path).unwrap();

    assert_eq!(Settings::load_from(&path).unwrap(), settings);
}

//! Двухступенчатое декодирование сырых данных построителей.
//!
//! Сначала JSON. Если не вышло, то ограниченный разбор плоского словаря
//! с одинарными кавычками и байтовыми строками:
//!
//! ```text
//! map    := '{' [ entry { ',' entry } [ ',' ] ] '}'
//! entry  := string ':' value
//! value  := string | 'b' string | number | 'True' | 'False' | 'None'
//! string := '\'' chars '\'' | '"' chars '"'     (экранирование \\ \' \" \n \t)
//! number := [ '-' ] digits [ '.' digits ]
//! ```
//!
//! Вложенные структуры и любые выражения отклоняются.

use serde_json::Value;

use super::value::{RawMap, RawValue};
use crate::error::ParseError;

/// Предельный размер входа для разбора
const MAX_INPUT_LEN: usize = 4 * 1024 * 1024;

pub fn decode_mapping(text: &str) -> Result<RawMap, ParseError> {
    if text.len() > MAX_INPUT_LEN {
        return Err(ParseError::Undecodable(format!(
            "вход {} байт превышает лимит",
            text.len()
        )));
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => {
            return Ok(map.into_iter().map(|(k, v)| (k, RawValue::from(v))).collect())
        }
        Ok(other) => return Err(ParseError::NotAMapping(type_name(&other).to_string())),
        Err(_) => {}
    }

    LiteralParser::new(text)
        .parse_map()
        .map_err(|reason| ParseError::Undecodable(reason))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct LiteralParser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            input: text.as_bytes(),
            pos: 0,
        }
    }

    fn parse_map(mut self) -> Result<RawMap, String> {
        let mut map = RawMap::new();

        self.skip_ws();
        self.expect(b'{')?;
        self.skip_ws();

        if self.peek() == Some(b'}') {
            self.pos += 1;
            return self.finish(map);
        }

        loop {
            self.skip_ws();
            if self.peek() == Some(b'}') {
                // висячая запятая
                self.pos += 1;
                break;
            }

            let key = self.parse_string()?;
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();
            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_ws();
            match self.next() {
                Some(b',') => continue,
                Some(b'}') => break,
                other => return Err(self.unexpected(other)),
            }
        }

        self.finish(map)
    }

    fn finish(mut self, map: RawMap) -> Result<RawMap, String> {
        self.skip_ws();
        if self.pos != self.input.len() {
            return Err(format!("лишние символы с позиции {}", self.pos));
        }
        Ok(map)
    }

    fn parse_value(&mut self) -> Result<RawValue, String> {
        match self.peek() {
            Some(b'\'') | Some(b'"') => self.parse_string().map(RawValue::Text),
            Some(b'b') if matches!(self.input.get(self.pos + 1), Some(b'\'') | Some(b'"')) => {
                self.pos += 1;
                self.parse_string().map(|s| RawValue::Bytes(s.into_bytes()))
            }
            Some(b'-') | Some(b'0'..=b'9') => self.parse_number(),
            Some(b'T') => self.keyword("True", RawValue::Structured(Value::Bool(true))),
            Some(b'F') => self.keyword("False", RawValue::Structured(Value::Bool(false))),
            Some(b'N') => self.keyword("None", RawValue::Structured(Value::Null)),
            other => Err(self.unexpected(other)),
        }
    }

    fn parse_string(&mut self) -> Result<String, String> {
        let quote = match self.next() {
            Some(q @ (b'\'' | b'"')) => q,
            other => return Err(self.unexpected(other)),
        };

        let mut out = Vec::new();
        loop {
            match self.next() {
                None => return Err("незакрытая строка".to_string()),
                Some(b'\\') => match self.next() {
                    Some(b'n') => out.push(b'\n'),
                    Some(b't') => out.push(b'\t'),
                    Some(c @ (b'\\' | b'\'' | b'"')) => out.push(c),
                    other => return Err(self.unexpected(other)),
                },
                Some(c) if c == quote => break,
                Some(c) => out.push(c),
            }
        }

        String::from_utf8(out).map_err(|e| e.to_string())
    }

    fn parse_number(&mut self) -> Result<RawValue, String> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(b'0'..=b'9' | b'.')) {
            self.pos += 1;
        }

        let literal = std::str::from_utf8(&self.input[start..self.pos]).map_err(|e| e.to_string())?;
        if let Ok(i) = literal.parse::<i64>() {
            return Ok(RawValue::Integer(i));
        }
        if let Ok(u) = literal.parse::<u64>() {
            return Ok(RawValue::Unsigned(u));
        }
        literal
            .parse::<f64>()
            .map(RawValue::Float)
            .map_err(|_| format!("невалидное число '{}'", literal))
    }

    fn keyword(&mut self, word: &str, value: RawValue) -> Result<RawValue, String> {
        if self.input[self.pos..].starts_with(word.as_bytes()) {
            self.pos += word.len();
            Ok(value)
        } else {
            Err(format!("неизвестный литерал на позиции {}", self.pos))
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), String> {
        match self.next() {
            Some(b) if b == byte => Ok(()),
            other => Err(self.unexpected(other)),
        }
    }

    fn unexpected(&self, found: Option<u8>) -> String {
        match found {
            Some(b) => format!("неожиданный символ '{}' на позиции {}", b as char, self.pos),
            None => "неожиданный конец входа".to_string(),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\n' | b'\r' | b'\t')) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }
}

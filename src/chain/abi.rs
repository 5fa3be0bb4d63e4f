//! Minimal Solidity ABI codec
//!
//! Covers exactly the shapes the registry, digital ID and plot contracts use:
//! `uint256` words, addresses, bools, strings, `uint256[]` and tuples of
//! those. Narrowing to native integers is left to the caller. Empty return data is reported as [`DecodeError::Empty`]
//! so callers can tell "nothing deployed here" apart from a garbled payload.

use alloy_primitives::{keccak256, Address, B256, U256};

use crate::error::DecodeError;

const WORD: usize = 32;

/// Selector of the standard `Error(string)` revert payload.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Uint(U256),
    Address(Address),
    Bool(bool),
    String(String),
    UintArray(Vec<U256>),
    Tuple(Vec<Token>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Uint,
    Address,
    Bool,
    String,
    UintArray,
    Tuple(Vec<ParamType>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        match self {
            Token::String(_) | Token::UintArray(_) => true,
            Token::Tuple(items) => items.iter().any(Token::is_dynamic),
            _ => false,
        }
    }

    fn head_size(&self) -> usize {
        match self {
            Token::Tuple(items) if !self.is_dynamic() => items.iter().map(Token::head_size).sum(),
            _ => WORD,
        }
    }
}

impl ParamType {
    fn is_dynamic(&self) -> bool {
        match self {
            ParamType::String | ParamType::UintArray => true,
            ParamType::Tuple(items) => items.iter().any(ParamType::is_dynamic),
            _ => false,
        }
    }

    fn head_size(&self) -> usize {
        match self {
            ParamType::Tuple(items) if !self.is_dynamic() => {
                items.iter().map(ParamType::head_size).sum()
            }
            _ => WORD,
        }
    }
}

/// First four bytes of the keccak hash of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// topic[0] of an event with the given canonical signature.
pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

/// Calldata for `signature` applied to `args`.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    out.extend(encode_params(args));
    out
}

pub fn encode_params(tokens: &[Token]) -> Vec<u8> {
    let head_len: usize = tokens.iter().map(Token::head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&len_word(head_len + tail.len()));
            tail.extend(encode_token(token));
        } else {
            head.extend(encode_token(token));
        }
    }

    head.extend(tail);
    head
}

fn encode_token(token: &Token) -> Vec<u8> {
    match token {
        Token::Uint(value) => value.to_be_bytes::<WORD>().to_vec(),
        Token::Bool(value) => len_word(usize::from(*value)).to_vec(),
        Token::Address(address) => {
            let mut word = [0u8; WORD];
            word[12..].copy_from_slice(address.as_slice());
            word.to_vec()
        }
        Token::String(value) => {
            let bytes = value.as_bytes();
            let mut out = len_word(bytes.len()).to_vec();
            out.extend_from_slice(bytes);
            let padding = (WORD - bytes.len() % WORD) % WORD;
            out.extend(std::iter::repeat(0u8).take(padding));
            out
        }
        Token::UintArray(values) => {
            let mut out = len_word(values.len()).to_vec();
            for value in values {
                out.extend_from_slice(&value.to_be_bytes::<WORD>());
            }
            out
        }
        Token::Tuple(items) => encode_params(items),
    }
}

fn len_word(value: usize) -> [u8; WORD] {
    U256::from(value).to_be_bytes::<WORD>()
}

/// Decode return data laid out as `types`.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }
    decode_params(types, data)
}

fn decode_params(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, DecodeError> {
    let mut tokens = Vec::with_capacity(types.len());
    let mut offset = 0usize;

    for ty in types {
        if ty.is_dynamic() {
            let pointer = read_usize(data, offset)?;
            let tail = data
                .get(pointer..)
                .ok_or_else(|| DecodeError::malformed(format!("offset {} out of range", pointer)))?;
            tokens.push(decode_token(ty, tail)?);
            offset += WORD;
        } else {
            let slice = data
                .get(offset..)
                .ok_or_else(|| DecodeError::malformed("truncated head"))?;
            tokens.push(decode_token(ty, slice)?);
            offset += ty.head_size();
        }
    }

    Ok(tokens)
}

fn decode_token(ty: &ParamType, data: &[u8]) -> Result<Token, DecodeError> {
    match ty {
        ParamType::Uint => Ok(Token::Uint(read_uint(data, 0)?)),
        ParamType::Address => {
            let word = read_word(data, 0)?;
            if word[..12].iter().any(|b| *b != 0) {
                return Err(DecodeError::malformed("address word has dirty high bytes"));
            }
            Ok(Token::Address(Address::from_slice(&word[12..])))
        }
        ParamType::Bool => match read_uint(data, 0)? {
            value if value.is_zero() => Ok(Token::Bool(false)),
            value if value == U256::from(1u8) => Ok(Token::Bool(true)),
            other => Err(DecodeError::malformed(format!("invalid bool {}", other))),
        },
        ParamType::String => {
            let len = read_usize(data, 0)?;
            let end = WORD
                .checked_add(len)
                .ok_or_else(|| DecodeError::malformed("string length overflow"))?;
            let bytes = data
                .get(WORD..end)
                .ok_or_else(|| DecodeError::malformed("truncated string"))?;
            let value = String::from_utf8(bytes.to_vec())
                .map_err(|_| DecodeError::malformed("string is not utf-8"))?;
            Ok(Token::String(value))
        }
        ParamType::UintArray => {
            let len = read_usize(data, 0)?;
            let needed = len
                .checked_mul(WORD)
                .and_then(|n| n.checked_add(WORD))
                .ok_or_else(|| DecodeError::malformed("array length overflow"))?;
            if data.len() < needed {
                return Err(DecodeError::malformed("truncated array"));
            }
            let values = (0..len)
                .map(|i| read_uint(data, WORD + i * WORD))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Token::UintArray(values))
        }
        ParamType::Tuple(items) => Ok(Token::Tuple(decode_params(items, data)?)),
    }
}

fn read_word(data: &[u8], offset: usize) -> Result<&[u8], DecodeError> {
    offset
        .checked_add(WORD)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| DecodeError::malformed(format!("no word at offset {}", offset)))
}

fn read_uint(data: &[u8], offset: usize) -> Result<U256, DecodeError> {
    Ok(U256::from_be_slice(read_word(data, offset)?))
}

/// Offsets and lengths must fit the host's address space.
fn read_usize(data: &[u8], offset: usize) -> Result<usize, DecodeError> {
    usize::try_from(read_uint(data, offset)?).map_err(|_| DecodeError::Overflow)
}

/// Read an indexed `uint256` topic.
pub fn topic_to_uint(topic: &B256) -> U256 {
    U256::from_be_bytes(topic.0)
}

/// Narrow a `uint256` to `u64`, failing with [`DecodeError::Overflow`].
pub fn narrow_u64(value: U256) -> Result<u64, DecodeError> {
    u64::try_from(value).map_err(|_| DecodeError::Overflow)
}

/// Extract the message of an `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let payload = data.strip_prefix(&ERROR_STRING_SELECTOR)?;
    match decode(&[ParamType::String], payload).ok()?.pop()? {
        Token::String(reason) if !reason.is_empty() => Some(reason),
        _ => None,
    }
}

/// Sequential typed reader over decoded tokens.
pub struct TokenReader {
    tokens: std::vec::IntoIter<Token>,
}

impl TokenReader {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into_iter(),
        }
    }

    fn next(&mut self, expected: &str) -> Result<Token, DecodeError> {
        self.tokens
            .next()
            .ok_or_else(|| DecodeError::malformed(format!("missing {}", expected)))
    }

    pub fn uint(&mut self) -> Result<U256, DecodeError> {
        match self.next("uint")? {
            Token::Uint(value) => Ok(value),
            other => Err(unexpected("uint", &other)),
        }
    }

    pub fn address(&mut self) -> Result<Address, DecodeError> {
        match self.next("address")? {
            Token::Address(value) => Ok(value),
            other => Err(unexpected("address", &other)),
        }
    }

    pub fn bool(&mut self) -> Result<bool, DecodeError> {
        match self.next("bool")? {
            Token::Bool(value) => Ok(value),
            other => Err(unexpected("bool", &other)),
        }
    }

    pub fn string(&mut self) -> Result<String, DecodeError> {
        match self.next("string")? {
            Token::String(value) => Ok(value),
            other => Err(unexpected("string", &other)),
        }
    }

    pub fn uint_array(&mut self) -> Result<Vec<U256>, DecodeError> {
        match self.next("uint[]")? {
            Token::UintArray(values) => Ok(values),
            other => Err(unexpected("uint[]", &other)),
        }
    }

    pub fn tuple(&mut self) -> Result<TokenReader, DecodeError> {
        match self.next("tuple")? {
            Token::Tuple(items) => Ok(TokenReader::new(items)),
            other => Err(unexpected("tuple", &other)),
        }
    }
}

fn unexpected(expected: &str, found: &Token) -> DecodeError {
    DecodeError::malformed(format!("expected {}, found {:?}", expected, found))
}

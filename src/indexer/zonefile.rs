//! Minimal RFC 1035 master file reader, covering the TXT and URI records
//! BNS subdomain zone files rely on.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneFile {
    pub origin: Option<String>,
    pub ttl: Option<u32>,
    pub txt: Vec<TxtRecord>,
    pub uri: Vec<UriRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtRecord {
    pub name: String,
    pub ttl: Option<u32>,
    pub txt: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriRecord {
    pub name: String,
    pub ttl: Option<u32>,
    pub priority: u16,
    pub weight: u16,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    text: String,
    quoted: bool,
}

const RECORD_CLASSES: [&str; 4] = ["IN", "CH", "HS", "CS"];

pub fn parse_zone_file(input: &str) -> Result<ZoneFile, String> {
    let mut zone_file = ZoneFile::default();
    let mut last_name: Option<String> = None;

    for (line_starts_blank, tokens) in logical_lines(input)? {
        let first = match tokens.first() {
            Some(first) => first,
            None => continue,
        };
        if !first.quoted && first.text.eq_ignore_ascii_case("$ORIGIN") {
            zone_file.origin = tokens.get(1).map(|t| t.text.clone());
            continue;
        }
        if !first.quoted && first.text.eq_ignore_ascii_case("$TTL") {
            zone_file.ttl = tokens.get(1).and_then(|t| t.text.parse::<u32>().ok());
            continue;
        }

        let mut rest = &tokens[..];
        let name = if line_starts_blank {
            last_name
                .clone()
                .ok_or("record without an owner name".to_string())?
        } else {
            rest = &rest[1..];
            first.text.clone()
        };
        last_name = Some(name.clone());

        let mut ttl = None;
        let mut record_type = None;
        while let Some((token, tail)) = rest.split_first() {
            rest = tail;
            if token.quoted {
                return Err(format!("unexpected quoted string before type in '{}'", name));
            }
            if ttl.is_none() {
                if let Ok(value) = token.text.parse::<u32>() {
                    ttl = Some(value);
                    continue;
                }
            }
            if RECORD_CLASSES.contains(&token.text.to_ascii_uppercase().as_str()) {
                continue;
            }
            record_type = Some(token.text.to_ascii_uppercase());
            break;
        }

        match record_type.as_deref() {
            Some("TXT") => zone_file.txt.push(TxtRecord {
                name,
                ttl,
                txt: rest.iter().map(|t| t.text.clone()).collect(),
            }),
            Some("URI") => {
                if rest.len() < 3 {
                    return Err(format!("URI record '{}' needs priority, weight and target", name));
                }
                let priority = rest[0]
                    .text
                    .parse::<u16>()
                    .map_err(|e| format!("invalid URI priority: {}", e))?;
                let weight = rest[1]
                    .text
                    .parse::<u16>()
                    .map_err(|e| format!("invalid URI weight: {}", e))?;
                zone_file.uri.push(UriRecord {
                    name,
                    ttl,
                    priority,
                    weight,
                    target: rest[2].text.clone(),
                });
            }
            Some(_) => {}
            None => return Err(format!("record '{}' has no type", name)),
        }
    }
    Ok(zone_file)
}

/// Joins parenthesized continuations, drops comments, and tokenizes.
/// The flag tells whether the record started with blank space, in which
/// case it inherits the previous owner name.
fn logical_lines(input: &str) -> Result<Vec<(bool, Vec<Token>)>, String> {
    let mut lines = vec![];
    let mut current: Vec<Token> = vec![];
    let mut starts_blank = false;
    let mut depth = 0usize;

    for raw_line in input.lines() {
        if depth == 0 {
            starts_blank = raw_line.starts_with(' ') || raw_line.starts_with('\t');
        }
        let mut chars = raw_line.chars().peekable();
        let mut word = String::new();
        while let Some(c) = chars.next() {
            match c {
                '"' => {
                    flush_word(&mut word, &mut current);
                    let mut text = String::new();
                    let mut closed = false;
                    while let Some(c) = chars.next() {
                        match c {
                            '\\' => {
                                if let Some(escaped) = chars.next() {
                                    text.push(escaped);
                                }
                            }
                            '"' => {
                                closed = true;
                                break;
                            }
                            c => text.push(c),
                        }
                    }
                    if !closed {
                        return Err(format!("unterminated quoted string in '{}'", raw_line));
                    }
                    current.push(Token { text, quoted: true });
                }
                ';' => break,
                '(' => {
                    flush_word(&mut word, &mut current);
                    depth += 1;
                }
                ')' => {
                    flush_word(&mut word, &mut current);
                    depth = depth
                        .checked_sub(1)
                        .ok_or(format!("unbalanced parenthesis in '{}'", raw_line))?;
                }
                c if c.is_whitespace() => flush_word(&mut word, &mut current),
                c => word.push(c),
            }
        }
        flush_word(&mut word, &mut current);
        if depth == 0 && !current.is_empty() {
            lines.push((starts_blank, std::mem::take(&mut current)));
        }
    }
    if depth != 0 {
        return Err("unbalanced parenthesis at end of zone file".to_string());
    }
    Ok(lines)
}

fn flush_word(word: &mut String, tokens: &mut Vec<Token>) {
    if !word.is_empty() {
        tokens.push(Token {
            text: std::mem::take(word),
            quoted: false,
        });
    }
}

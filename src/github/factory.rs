use crate::error::{Error, Result};
use crate::github::credential::Credential;
use serde::Deserialize;

/// Tags the factory knows how to construct, in declaration order.
pub const SUPPORTED_TAGS: &[&str] = &["null", "pat", "client_secret"];

/// A credential descriptor as it appears in config or on the command line:
/// either a bare tag (`"null"`) or a tag with positional parameters
/// (`["pat", "ghp_..."]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Descriptor {
    Tag(String),
    Tagged(Vec<String>),
}

impl Descriptor {
    /// Split into tag and positional parameters.
    fn parts(&self) -> Result<(&str, &[String])> {
        match self {
            Descriptor::Tag(tag) => Ok((tag.as_str(), &[])),
            Descriptor::Tagged(items) => {
                let (tag, args) = items
                    .split_first()
                    .ok_or_else(|| Error::BadCredentialDescriptor("empty descriptor".to_string()))?;
                Ok((tag.as_str(), args))
            }
        }
    }

    /// Parse a descriptor from a single CLI argument: a JSON array, or a
    /// bare tag when the argument is not valid JSON.
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str::<Descriptor>(raw).unwrap_or_else(|_| Descriptor::Tag(raw.to_string()))
    }
}

/// The full list of recognized tags.
pub fn supported() -> &'static [&'static str] {
    SUPPORTED_TAGS
}

/// Whether a tag is recognized.
pub fn supports(tag: &str) -> bool {
    SUPPORTED_TAGS.contains(&tag)
}

/// Construct a credential from a tag and positional parameters.
pub fn create(tag: &str, args: &[String]) -> Result<Credential> {
    if tag.is_empty() {
        return Err(Error::BadCredentialDescriptor(
            "empty credential tag".to_string(),
        ));
    }

    match tag {
        "null" => {
            expect_arity(tag, args, 0)?;
            Ok(Credential::anonymous())
        }
        "pat" => {
            expect_arity(tag, args, 1)?;
            Credential::personal(args[0].clone())
        }
        "client_secret" => {
            expect_arity(tag, args, 2)?;
            Credential::client_secret(args[0].clone(), args[1].clone())
        }
        other => Err(Error::BadCredentialDescriptor(format!(
            "unknown credential tag `{other}` (supported: {})",
            SUPPORTED_TAGS.join(", ")
        ))),
    }
}

/// Construct a batch of credentials from descriptors.
///
/// Duplicate identities collapse to a single instance; the last occurrence
/// wins while keeping the position of the first.
pub fn create_batch(descriptors: &[Descriptor]) -> Result<Vec<Credential>> {
    let mut out: Vec<Credential> = Vec::with_capacity(descriptors.len());

    for descriptor in descriptors {
        let (tag, args) = descriptor.parts()?;
        let cred = create(tag, args)?;
        let identity = cred.identity();

        match out.iter().position(|c| c.identity() == identity) {
            Some(idx) => out[idx] = cred,
            None => out.push(cred),
        }
    }

    Ok(out)
}

fn expect_arity(tag: &str, args: &[String], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(Error::BadCredentialDescriptor(format!(
            "tag `{tag}` takes {expected} parameter(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

//! Output records in the SMS Backup & Restore shape and their serializers.

use std::io::{self, Write};

use crate::utils::xml::escape_attr;

pub const MMS_CONTENT_TYPE: &str = "application/vnd.wap.multipart.related";
pub const PLACEHOLDER_TEXTS: &[&str] = &["MMS Sent", "MMS Received"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Received,
    Sent,
}

impl Direction {
    #[must_use]
    pub const fn from_sent(sent: bool) -> Self {
        if sent { Self::Sent } else { Self::Received }
    }

    #[must_use]
    pub const fn sms_type(self) -> u8 {
        match self {
            Self::Received => 1,
            Self::Sent => 2,
        }
    }

    #[must_use]
    pub const fn msg_box(self) -> u8 {
        match self {
            Self::Received => 1,
            Self::Sent => 2,
        }
    }

    #[must_use]
    pub const fn m_type(self) -> u8 {
        match self {
            Self::Received => 132,
            Self::Sent => 128,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrRole {
    Originator,
    Recipient,
}

impl AddrRole {
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Originator => 137,
            Self::Recipient => 151,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsRecord {
    pub address: String,
    pub date_ms: i64,
    pub direction: Direction,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MmsPart {
    Text(String),
    Binary {
        content_type: String,
        name: String,
        data_base64: String,
    },
}

impl MmsPart {
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Self::Binary { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmsAddr {
    pub address: String,
    pub role: AddrRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmsRecord {
    /// Conversation participants, excluding the owner.
    pub addresses: Vec<String>,
    pub date_ms: i64,
    pub direction: Direction,
    pub parts: Vec<MmsPart>,
    pub addrs: Vec<MmsAddr>,
}

impl MmsRecord {
    #[must_use]
    pub fn text_only(&self) -> bool {
        !self.parts.iter().any(MmsPart::is_binary)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputRecord {
    Sms(SmsRecord),
    Mms(MmsRecord),
}

#[must_use]
pub fn is_placeholder_text(text: &str) -> bool {
    PLACEHOLDER_TEXTS.contains(&text.trim())
}

pub fn write_record(out: &mut impl Write, record: &OutputRecord) -> io::Result<()> {
    match record {
        OutputRecord::Sms(sms) => write_sms(out, sms),
        OutputRecord::Mms(mms) => write_mms(out, mms),
    }
}

pub fn write_sms(out: &mut impl Write, record: &SmsRecord) -> io::Result<()> {
    writeln!(
        out,
        r#"<sms protocol="0" address="{}" date="{}" type="{}" subject="null" body="{}" toa="null" sc_toa="null" service_center="null" read="1" status="1" locked="0" /> "#,
        escape_attr(&record.address),
        record.date_ms,
        record.direction.sms_type(),
        escape_attr(&record.body),
    )
}

pub fn write_mms(out: &mut impl Write, record: &MmsRecord) -> io::Result<()> {
    writeln!(
        out,
        r#"<mms address="{}" ct_t="{MMS_CONTENT_TYPE}" date="{}" m_type="{}" msg_box="{}" read="1" rr="129" seen="1" sim_slot="1" sub_id="-1" text_only="{}"> "#,
        escape_attr(&record.addresses.join("~")),
        record.date_ms,
        record.direction.m_type(),
        record.direction.msg_box(),
        u8::from(record.text_only()),
    )?;
    writeln!(out, "  <parts> ")?;
    for part in &record.parts {
        write_part(out, part)?;
    }
    writeln!(out, "  </parts> ")?;
    writeln!(out, "  <addrs> ")?;
    for addr in &record.addrs {
        writeln!(
            out,
            r#"    <addr address="{}" charset="106" type="{}"/> "#,
            escape_attr(&addr.address),
            addr.role.code(),
        )?;
    }
    writeln!(out, "  </addrs> ")?;
    writeln!(out, "</mms> ")
}

fn write_part(out: &mut impl Write, part: &MmsPart) -> io::Result<()> {
    match part {
        MmsPart::Text(text) => writeln!(
            out,
            r#"    <part ct="text/plain" seq="0" text="{}"/> "#,
            escape_attr(text)
        ),
        MmsPart::Binary {
            content_type,
            name,
            data_base64,
        } => {
            let name = escape_attr(name);
            writeln!(
                out,
                r#"    <part seq="0" ct="{content_type}" name="{name}" chset="null" cd="null" fn="null" cid="&lt;{name}&gt;" cl="{name}" ctt_s="null" ctt_t="null" text="null" data="{data_base64}" />"#,
            )
        }
    }
}

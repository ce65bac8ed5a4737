//! ## Recipient table rows

use crate::ltp::prop_context::PropertySet;

const PROP_DISPLAY_NAME: u16 = 0x3001;
const PROP_ADDRESS_TYPE: u16 = 0x3002;
const PROP_EMAIL_ADDRESS: u16 = 0x3003;
const PROP_RECIPIENT_TYPE: u16 = 0x0C15;
const PROP_SMTP_ADDRESS: u16 = 0x39FE;

/// `PidTagRecipientType`
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RecipientType {
    To,
    Cc,
    Bcc,
}

impl RecipientType {
    fn from_raw(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::To),
            2 => Some(Self::Cc),
            3 => Some(Self::Bcc),
            _ => None,
        }
    }
}

/// One row of a message's recipient table.
pub struct Recipient {
    properties: PropertySet,
}

impl Recipient {
    pub(crate) fn new(properties: PropertySet) -> Self {
        Self { properties }
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    pub fn display_name(&self) -> Option<String> {
        self.properties.string(PROP_DISPLAY_NAME)
    }

    pub fn recipient_type(&self) -> Option<RecipientType> {
        RecipientType::from_raw(self.properties.int32(PROP_RECIPIENT_TYPE)?)
    }

    /// `SMTP`, `EX`, `FAX`, ...
    pub fn address_type(&self) -> Option<String> {
        self.properties.string(PROP_ADDRESS_TYPE)
    }

    pub fn email_address(&self) -> Option<String> {
        self.properties.string(PROP_EMAIL_ADDRESS)
    }

    /// The resolved SMTP address, when the transport recorded one beside
    /// an `EX` address.
    pub fn smtp_address(&self) -> Option<String> {
        self.properties.string(PROP_SMTP_ADDRESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ltp::prop_context::PropertyValue;

    fn recipient(values: &[(u16, PropertyValue)]) -> Recipient {
        let mut properties = PropertySet::default();
        for (prop_id, value) in values {
            properties.insert(*prop_id, value.clone());
        }
        Recipient::new(properties)
    }

    #[test]
    fn test_recipient_accessors() {
        let recipient = recipient(&[
            (
                PROP_DISPLAY_NAME,
                PropertyValue::Unicode("Ed Pfromer".to_string()),
            ),
            (PROP_RECIPIENT_TYPE, PropertyValue::Integer32(1)),
            (
                PROP_ADDRESS_TYPE,
                PropertyValue::Unicode("SMTP".to_string()),
            ),
            (
                PROP_EMAIL_ADDRESS,
                PropertyValue::Unicode("epfromer@gmail.com".to_string()),
            ),
        ]);

        assert_eq!(recipient.display_name().unwrap(), "Ed Pfromer");
        assert_eq!(recipient.recipient_type().unwrap(), RecipientType::To);
        assert_eq!(recipient.address_type().unwrap(), "SMTP");
        assert_eq!(recipient.email_address().unwrap(), "epfromer@gmail.com");
        assert!(recipient.smtp_address().is_none());
    }

    #[test]
    fn test_unknown_recipient_type() {
        let recipient = recipient(&[(PROP_RECIPIENT_TYPE, PropertyValue::Integer32(9))]);
        assert!(recipient.recipient_type().is_none());
    }
}

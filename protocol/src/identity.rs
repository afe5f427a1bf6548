use crate::ClientId;

pub const PALETTE: [&str; 7] = ["red", "blue", "green", "purple", "orange", "pink", "cyan"];

pub const CLIENT_ID_LEN: usize = 9;

/// Source of connection ids and cursor colors.
pub trait IdentityGenerator: Send {
    fn client_id(&mut self) -> ClientId;
    fn color(&mut self) -> String;
}

/// Random ids and colors. Ids are short and never checked for collisions.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdentity;

impl IdentityGenerator for RandomIdentity {
    fn client_id(&mut self) -> ClientId {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(CLIENT_ID_LEN);
        id
    }

    fn color(&mut self) -> String {
        let byte = uuid::Uuid::new_v4().as_bytes()[0];
        PALETTE[byte as usize % PALETTE.len()].to_string()
    }
}

/// Deterministic generator: `client-1`, `client-2`, ... and palette colors in order.
#[derive(Debug, Default, Clone)]
pub struct SequentialIdentity {
    next_id: usize,
    next_color: usize,
}

impl SequentialIdentity {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityGenerator for SequentialIdentity {
    fn client_id(&mut self) -> ClientId {
        self.next_id += 1;
        format!("client-{}", self.next_id)
    }

    fn color(&mut self) -> String {
        let color = PALETTE[self.next_color % PALETTE.len()];
        self.next_color += 1;
        color.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_generates_short_ids_and_palette_colors() {
        let mut identity = RandomIdentity;
        for _ in 0..32 {
            let id = identity.client_id();
            assert_eq!(id.len(), CLIENT_ID_LEN);
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
            assert!(PALETTE.contains(&identity.color().as_str()));
        }
    }

    #[test]
    fn it_cycles_sequential_colors() {
        let mut identity = SequentialIdentity::new();
        assert_eq!(identity.client_id(), "client-1");
        assert_eq!(identity.client_id(), "client-2");
        let colors: Vec<String> = (0..8).map(|_| identity.color()).collect();
        assert_eq!(colors[0], "red");
        assert_eq!(colors[6], "cyan");
        assert_eq!(colors[7], "red");
    }
}

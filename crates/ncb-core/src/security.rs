use crate::domain::UserId;

// ============== Authorization ==============

/// Admin commands are gated by a static id list. An empty list means no admins.
pub fn is_admin(user_id: Option<UserId>, admin_ids: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    admin_ids.contains(&user_id.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_list_gates_access() {
        let admins = [10, 20];
        assert!(is_admin(Some(UserId(10)), &admins));
        assert!(!is_admin(Some(UserId(11)), &admins));
        assert!(!is_admin(None, &admins));
        assert!(!is_admin(Some(UserId(10)), &[]));
    }
}

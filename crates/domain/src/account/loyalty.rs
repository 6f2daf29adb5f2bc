use common::UserId;
use store::Transaction;

use super::load_user_for_update;
use crate::error::Result;

/// Credits a customer's loyalty balance within the caller's transaction.
/// Returns the new balance.
pub async fn accrue_loyalty<T: Transaction>(
    tx: &mut T,
    customer_id: UserId,
    points: u32,
) -> Result<u32> {
    let mut user = load_user_for_update(tx, customer_id).await?;
    let balance = user.accrue_points(points)?;
    if points > 0 {
        tx.update_user(&user.to_record()).await?;
    }
    Ok(balance)
}

/// Takes back points earned by an order, but only when the balance still
/// holds all of them.
pub async fn revoke_loyalty_if_covered<T: Transaction>(
    tx: &mut T,
    customer_id: UserId,
    points: u32,
) -> Result<bool> {
    let mut user = load_user_for_update(tx, customer_id).await?;
    let revoked = user.revoke_points_if_covered(points)?;
    if revoked && points > 0 {
        tx.update_user(&user.to_record()).await?;
    }
    Ok(revoked)
}

/// diesel table for coupons
table! {
    coupons (id) {
        id -> Integer,
        code -> VarChar,
        description -> VarChar,
        discount_kind -> VarChar,
        discount_value -> Double,
        expires_at -> Timestamptz,
        is_active -> Bool,
        distribution_order -> Integer,
        is_claimed -> Bool,
        claimed_at -> Nullable<Timestamptz>,
        claim_id -> Nullable<Integer>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

/// diesel table for claims
table! {
    claims (id) {
        id -> Integer,
        coupon_id -> Integer,
        ip_address -> VarChar,
        session_marker -> VarChar,
        user_id -> Nullable<Integer>,
        is_guest -> Bool,
        user_agent -> Nullable<VarChar>,
        claimed_at -> Timestamptz,
    }
}

/// diesel table for user_roles
table! {
    user_roles (id) {
        id -> Integer,
        user_id -> Integer,
        role -> VarChar,
    }
}

joinable!(claims -> coupons (coupon_id));

allow_tables_to_appear_in_same_query!(coupons, claims, user_roles);
